/// Middleware for the API server
///
/// - `request_id`: tags every request and response with an `X-Request-ID`

pub mod request_id;
