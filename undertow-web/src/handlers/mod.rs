//! HTTP request handlers

pub mod api;
pub mod range;
pub mod stream;

pub use api::{api_add_torrent, api_files, api_pulse, api_status, api_stream_url};
pub use range::{RangeWindow, parse_range_header};
pub use stream::{stream_file, stream_legacy};
