use thiserror::Error;

/// Error type definitions
#[derive(Error, Debug)]
pub enum Error {
    #[error("open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("read header: {0}")]
    Header(#[source] csv::Error),

    #[error("read row {row}: {source}")]
    Row {
        row: usize,
        #[source]
        source: csv::Error,
    },

    #[error("no columns in header of {0}")]
    EmptyHeader(String),

    #[error("spreadsheet container: {0}")]
    Container(String),

    #[error("sheet '{name}' not found in workbook '{workbook}'. Available sheets: {}", .available.join(", "))]
    SheetNotFound {
        name: String,
        workbook: String,
        available: Vec<String>,
    },
}

/// Type alias for Result
pub type Result<T> = std::result::Result<T, Error>;

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::Container(err.to_string())
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::Container(err.to_string())
    }
}
