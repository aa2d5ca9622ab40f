pub mod request;

pub use request::{instrument_requests, REQUEST_ID_HEADER};
