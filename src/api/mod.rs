pub mod page;
pub mod request;
pub mod response;
pub mod routes;
