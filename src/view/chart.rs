use ratatui::buffer::{Buffer, Cell};
use ratatui::layout::Rect;
use ratatui::widgets::{Sparkline as SparklineWidget, Widget};

use crate::types::{PnlPoint, PricePoint, Timestamp};

use super::format::format_timestamp;

/// Eighths per row; level 1 is the lowest visible bar, 8 a full block.
const LEVELS: u64 = 8;
const FLAT_LEVEL: u64 = LEVELS / 2;

/// A series squeezed into a one-line text chart.
#[derive(Debug, Clone, PartialEq)]
pub struct Sparkline {
    pub line: String,
    pub min: f64,
    pub max: f64,
    pub last: f64,
    pub from: String,
    pub to: String,
}

impl Sparkline {
    pub fn from_prices(points: &[PricePoint], width: usize) -> Option<Self> {
        build(points.iter().map(|p| (p.timestamp.as_ref(), p.price)), width)
    }

    pub fn from_pnl(points: &[PnlPoint], width: usize) -> Option<Self> {
        build(points.iter().map(|p| (p.timestamp.as_ref(), p.pnl)), width)
    }
}

fn build<'a>(series: impl Iterator<Item = (Option<&'a Timestamp>, f64)>, width: usize) -> Option<Sparkline> {
    let points: Vec<_> = series.filter(|(_, v)| v.is_finite()).collect();
    if points.is_empty() || width == 0 {
        return None;
    }
    let width = width.min(u16::MAX as usize);
    let visible = &points[points.len().saturating_sub(width)..];
    let values: Vec<f64> = visible.iter().map(|(_, v)| *v).collect();

    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    Some(Sparkline {
        line: render_bars(&values, min, max),
        min,
        max,
        last: values[values.len() - 1],
        from: format_timestamp(visible[0].0),
        to: format_timestamp(visible[visible.len() - 1].0),
    })
}

fn render_bars(values: &[f64], min: f64, max: f64) -> String {
    let span = max - min;
    let levels: Vec<u64> = values
        .iter()
        .map(|v| {
            if span <= f64::EPSILON {
                FLAT_LEVEL
            } else {
                1 + ((v - min) / span * (LEVELS - 1) as f64).round() as u64
            }
        })
        .collect();

    let area = Rect::new(0, 0, levels.len() as u16, 1);
    let mut buf = Buffer::empty(area);
    SparklineWidget::default()
        .data(&levels)
        .max(LEVELS)
        .render(area, &mut buf);
    buf.content.iter().map(Cell::symbol).collect()
}
