use core::fmt::{self, Write};

use heapless::String;

use crate::frame::Reading;

/// Capacity of a formatted report line. Fits two arbitrary `f32` values.
pub const REPORT_CAPACITY: usize = 128;

/// One formatted, CRLF-terminated report line.
pub type ReportLine = String<REPORT_CAPACITY>;

/// Formats a reading as `Temp: 24.5 C | Hum: 50.0 %\r\n`.
///
/// Each value carries exactly one decimal digit; the line ends with CRLF for
/// line-oriented serial terminals.
pub fn format_reading(reading: &Reading) -> Result<ReportLine, fmt::Error> {
    let mut line = ReportLine::new();
    write!(line, "{reading}\r\n")?;
    Ok(line)
}
