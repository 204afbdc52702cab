//! Text produced by ktest: generated driver programs, comparison tables, test reports
//! and IDE service messages.

pub mod ansi;
mod driver;
mod report;
mod scale;
mod table;
pub mod teamcity;

pub use driver::{BenchDriverOptions, DriverGenerator, ITERATIONS_RATE, MIN_TRIES, UNROLL};
pub use report::{ReportOptions, format_report};
pub use scale::Scaler;
pub use table::{RenderOptions, render_tables};

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("template: {0}")]
    Template(#[from] Box<handlebars::TemplateError>),

    #[error("render: {0}")]
    Render(#[from] handlebars::RenderError),

    #[error("{0}: no benchmark methods selected")]
    NoMethods(String),
}
