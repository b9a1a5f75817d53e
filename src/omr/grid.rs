//! Assignment of bubble candidates to questions and options
//!
//! Candidates are grouped into rows by vertical position and into answer
//! columns by horizontal band. Each (row, column) cell is then trimmed or
//! accepted so that its bubbles map onto option positions left to right.

use super::bubbles::BubbleCandidate;
use super::config::{GridConfig, LayoutConfig};
use std::cmp::Ordering;

/// Outcome for one question cell
#[derive(Debug, Clone, PartialEq)]
pub enum CellDecision {
    /// Enough bubbles, none marked
    Blank,
    /// Fewer bubbles than the configured minimum
    UnderPopulated { found: usize },
    /// Exactly one marked bubble
    Marked { option: u8 },
    /// Several marked bubbles; the strongest was chosen
    Ambiguous { option: u8, marked_options: Vec<u8> },
}

impl CellDecision {
    pub fn option(&self) -> Option<u8> {
        match self {
            Self::Marked { option } | Self::Ambiguous { option, .. } => Some(*option),
            Self::Blank | Self::UnderPopulated { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CellOutcome {
    pub question: u32,
    pub decision: CellDecision,
}

/// Group candidates into rows and columns and decide every cell.
///
/// `region_width` and `region_height` are the answer region's dimensions;
/// candidate coordinates are relative to it.
pub fn assign_cells(
    candidates: &[BubbleCandidate],
    region_width: u32,
    region_height: u32,
    layout: &LayoutConfig,
    grid: &GridConfig,
) -> Vec<CellOutcome> {
    let row_height = region_height as f32 / layout.rows_per_column as f32;
    let rows = cluster_rows(candidates, row_height * grid.row_tolerance);
    if rows.len() > layout.rows_per_column {
        tracing::warn!(
            found = rows.len(),
            expected = layout.rows_per_column,
            "Extra bubble rows ignored"
        );
    }

    let mut outcomes = Vec::new();
    for (row_index, row) in rows.iter().take(layout.rows_per_column).enumerate() {
        let mut cells: Vec<Vec<&BubbleCandidate>> = vec![Vec::new(); layout.answer_columns];
        for candidate in row {
            let column = column_of(
                candidate.cx,
                region_width,
                layout.answer_columns,
                grid.last_column_relaxation,
            );
            cells[column].push(candidate);
        }

        for (column, cell) in cells.into_iter().enumerate() {
            let question = (column * layout.rows_per_column + row_index + 1) as u32;
            let found = cell.len();
            let retained = resolve_cell(
                cell,
                layout.choices,
                layout.min_choices(),
                grid.stray_area_ratio,
            );
            let decision = match retained {
                Some(retained) => decide(&retained),
                None => CellDecision::UnderPopulated { found },
            };
            outcomes.push(CellOutcome { question, decision });
        }
    }

    for outcome in &outcomes {
        match &outcome.decision {
            CellDecision::UnderPopulated { found } => {
                tracing::warn!(
                    question = outcome.question,
                    found,
                    "Too few bubbles in cell, no answer"
                );
            }
            CellDecision::Ambiguous { option, marked_options } => {
                tracing::warn!(
                    question = outcome.question,
                    chosen = option,
                    ?marked_options,
                    "Several bubbles marked, keeping the strongest"
                );
            }
            decision => tracing::debug!(question = outcome.question, ?decision, "Cell decided"),
        }
    }

    outcomes
}

/// Sweep candidates in (cy, cx) order, opening a new row whenever a centre
/// is more than `tolerance` away from the first centre of the current row
pub fn cluster_rows(candidates: &[BubbleCandidate], tolerance: f32) -> Vec<Vec<&BubbleCandidate>> {
    let mut sorted: Vec<&BubbleCandidate> = candidates.iter().collect();
    sorted.sort_by(|a, b| a.cy.total_cmp(&b.cy).then(a.cx.total_cmp(&b.cx)));

    let mut rows: Vec<Vec<&BubbleCandidate>> = Vec::new();
    let mut anchor = f32::NEG_INFINITY;
    for candidate in sorted {
        if (candidate.cy - anchor).abs() <= tolerance {
            if let Some(row) = rows.last_mut() {
                row.push(candidate);
                continue;
            }
        }
        anchor = candidate.cy;
        rows.push(vec![candidate]);
    }
    rows
}

/// Column band of a centre `x`.
///
/// Bands are equal slices of the region width, except that the last band
/// starts `relaxation` band widths early and runs to the right edge.
pub fn column_of(x: f32, region_width: u32, columns: usize, relaxation: f32) -> usize {
    if columns <= 1 {
        return 0;
    }
    let band = region_width as f32 / columns as f32;
    let last_start = (columns - 1) as f32 * band - relaxation * band;
    if x >= last_start {
        return columns - 1;
    }
    ((x / band).floor().max(0.0) as usize).min(columns - 2)
}

/// Reduce a cell to at most `choices` candidates ordered left to right.
/// Returns `None` when fewer than `min_choices` remain.
pub fn resolve_cell(
    mut cell: Vec<&BubbleCandidate>,
    choices: usize,
    min_choices: usize,
    stray_area_ratio: f64,
) -> Option<Vec<&BubbleCandidate>> {
    cell.sort_by(|a, b| a.cx.total_cmp(&b.cx));

    if cell.len() == choices + 1 {
        let (smallest, _) = cell
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.area.total_cmp(&b.1.area))?;
        let others: Vec<f64> = cell
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != smallest)
            .map(|(_, c)| c.area)
            .collect();
        let mean = others.iter().sum::<f64>() / others.len() as f64;
        if cell[smallest].area < stray_area_ratio * mean {
            cell.remove(smallest);
        } else {
            cell.remove(0);
        }
    } else if cell.len() > choices + 1 {
        let median = median_area(&cell);
        // Stable sort keeps left-to-right order among equal distances
        cell.sort_by(|a, b| {
            (a.area - median)
                .abs()
                .partial_cmp(&(b.area - median).abs())
                .unwrap_or(Ordering::Equal)
        });
        cell.truncate(choices);
        cell.sort_by(|a, b| a.cx.total_cmp(&b.cx));
    }

    if cell.len() < min_choices || cell.is_empty() {
        return None;
    }
    Some(cell)
}

fn median_area(cell: &[&BubbleCandidate]) -> f64 {
    let mut areas: Vec<f64> = cell.iter().map(|c| c.area).collect();
    areas.sort_by(f64::total_cmp);
    let mid = areas.len() / 2;
    if areas.len() % 2 == 0 {
        (areas[mid - 1] + areas[mid]) / 2.0
    } else {
        areas[mid]
    }
}

/// Pick the marked option of a resolved cell, ordered left to right.
/// Ties in strength go to the leftmost bubble.
pub fn decide(retained: &[&BubbleCandidate]) -> CellDecision {
    let marked: Vec<(u8, f64)> = retained
        .iter()
        .enumerate()
        .filter(|(_, c)| c.is_marked)
        .map(|(i, c)| ((i + 1) as u8, c.mark_strength))
        .collect();

    match marked.as_slice() {
        [] => CellDecision::Blank,
        [(option, _)] => CellDecision::Marked { option: *option },
        [first, rest @ ..] => {
            let mut best = *first;
            for &(option, strength) in rest {
                if strength > best.1 {
                    best = (option, strength);
                }
            }
            CellDecision::Ambiguous {
                option: best.0,
                marked_options: marked.iter().map(|(o, _)| *o).collect(),
            }
        }
    }
}
