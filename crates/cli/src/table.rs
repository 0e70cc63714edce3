// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plain-text tables for list output.

use std::io::Write;

use crate::color;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Paint {
    Plain,
    Muted,
    Status,
}

#[derive(Debug, Clone)]
pub struct Column {
    header: &'static str,
    align: Align,
    paint: Paint,
    max: Option<usize>,
}

impl Column {
    pub fn left(header: &'static str) -> Self {
        Self { header, align: Align::Left, paint: Paint::Plain, max: None }
    }

    pub fn right(header: &'static str) -> Self {
        Self { align: Align::Right, ..Self::left(header) }
    }

    /// Ids and other secondary values.
    pub fn muted(header: &'static str) -> Self {
        Self { paint: Paint::Muted, ..Self::left(header) }
    }

    /// Status words, colored by meaning.
    pub fn status(header: &'static str) -> Self {
        Self { paint: Paint::Status, ..Self::left(header) }
    }

    /// Truncate cells longer than `max` characters.
    pub fn with_max(mut self, max: usize) -> Self {
        self.max = Some(max.max(1));
        self
    }

    fn fit(&self, cell: &str) -> String {
        match self.max {
            Some(max) if cell.chars().count() > max => {
                let kept: String = cell.chars().take(max - 1).collect();
                format!("{kept}…")
            }
            _ => cell.to_string(),
        }
    }

    fn paint(&self, cell: &str) -> String {
        match self.paint {
            Paint::Plain => cell.to_string(),
            Paint::Muted => color::muted(cell),
            Paint::Status => {
                let word = cell.trim_end();
                format!("{}{}", color::status(word), &cell[word.len()..])
            }
        }
    }
}

pub struct Table {
    columns: Vec<Column>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns, rows: Vec::new() }
    }

    /// Add a row; missing cells render empty, extra cells are ignored.
    pub fn row(&mut self, cells: Vec<String>) {
        let row = self.columns.iter().enumerate().map(|(i, col)| col.fit(cells.get(i).map_or("", String::as_str)));
        self.rows.push(row.collect());
    }

    fn widths(&self) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .map(|(i, col)| {
                let widest = self.rows.iter().map(|r| r[i].chars().count()).max().unwrap_or(0);
                widest.max(col.header.len())
            })
            .collect()
    }

    pub fn render(&self, out: &mut (impl Write + ?Sized)) {
        let widths = self.widths();
        let last = self.columns.len().saturating_sub(1);

        let headers: Vec<String> = self
            .columns
            .iter()
            .zip(&widths)
            .enumerate()
            .map(|(i, (col, w))| color::header(&pad(col.header, *w, col.align, i == last)))
            .collect();
        let _ = writeln!(out, "{}", headers.join("  "));

        for row in &self.rows {
            let cells: Vec<String> = self
                .columns
                .iter()
                .zip(&widths)
                .zip(row)
                .enumerate()
                .map(|(i, ((col, w), cell))| col.paint(&pad(cell, *w, col.align, i == last)))
                .collect();
            let _ = writeln!(out, "{}", cells.join("  "));
        }
    }
}

fn pad(text: &str, width: usize, align: Align, last: bool) -> String {
    let fill = width.saturating_sub(text.chars().count());
    match align {
        Align::Right => format!("{}{text}", " ".repeat(fill)),
        Align::Left if last => text.to_string(),
        Align::Left => format!("{text}{}", " ".repeat(fill)),
    }
}

#[cfg(test)]
#[path = "table_tests.rs"]
mod tests;
