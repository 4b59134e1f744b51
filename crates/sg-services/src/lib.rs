//! Request handlers for the `/page`, `/dns` and `/search` endpoints.
//!
//! Each handler takes [`request::RequestParams`] and returns a
//! [`response::Response`]. Routing and serving belong to whatever hosts
//! these handlers; nothing here binds a socket.

pub mod config;
pub mod dns;
pub mod page;
pub mod request;
pub mod response;
pub mod search;
