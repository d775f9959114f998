use plotlib::{
    page::Page,
    repr::Plot,
    style::{PointMarker, PointStyle},
    view::ContinuousView,
};
use prettytable::{Cell, Row, Table};

use crate::error::{Error, Result};
use crate::gridworld::*;
use crate::solver::ResultSink;

pub fn grid_state_values_table(state_values: &ValueGrid) -> Table {
    let mut table = Table::new();
    for r in 0..state_values.rows() {
        let cells = (0..state_values.cols())
            .map(|c| Cell::new(format!("{:.2}", state_values.get((r, c))).as_ref()))
            .collect();
        table.add_row(Row::new(cells));
    }
    table
}

pub fn grid_policy_table(policy: &PolicyGrid) -> Table {
    let mut table = Table::new();
    for r in 0..policy.rows() {
        let cells = (0..policy.cols())
            .map(|c| Cell::new(policy.get((r, c)).label()))
            .collect();
        table.add_row(Row::new(cells));
    }
    table
}

/// Prints policy and value tables to stdout.
pub struct TableSink;

impl ResultSink for TableSink {
    fn accept_values(&mut self, values: &ValueGrid) -> Result<()> {
        grid_state_values_table(values).printstd();
        Ok(())
    }

    fn accept_policy(&mut self, policy: &PolicyGrid) -> Result<()> {
        grid_policy_table(policy).printstd();
        Ok(())
    }
}

/// Text plot of state values: one series per grid row, column on the x axis.
pub struct PlotSink {
    width: u32,
    height: u32,
}

impl PlotSink {
    pub fn new(width: u32, height: u32) -> PlotSink {
        PlotSink { width, height }
    }

    pub fn render(&self, values: &ValueGrid) -> Result<String> {
        let mut view = ContinuousView::new()
            .x_range(-0.5, values.cols() as f64 - 0.5)
            .x_label("Column")
            .y_label("Value");
        for r in 0..values.rows() {
            let points = (0..values.cols())
                .map(|c| (c as f64, values.get((r, c))))
                .collect();
            let marker = match r % 3 {
                0 => PointMarker::Circle,
                1 => PointMarker::Square,
                _ => PointMarker::Cross,
            };
            view = view.add(Plot::new(points).point_style(PointStyle::new().marker(marker)));
        }

        Page::single(&view)
            .dimensions(self.width, self.height)
            .to_text()
            .map_err(|e| Error::Render(e.to_string()))
    }
}

impl Default for PlotSink {
    fn default() -> Self {
        PlotSink::new(80, 30)
    }
}

impl ResultSink for PlotSink {
    fn accept_values(&mut self, values: &ValueGrid) -> Result<()> {
        println!("{}", self.render(values)?);
        Ok(())
    }
}
