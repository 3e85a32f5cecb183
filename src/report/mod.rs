pub mod generator;

pub use generator::{
    build_rows, default_report_name, generate_report, render_csv, ReportRow, ACTIVE_MARKER,
    REPORT_COLUMNS,
};
