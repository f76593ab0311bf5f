//! Authentication module
//!
//! Provides HS256 bearer tokens, bcrypt password hashing and the
//! authorization gate that protects resource routes.

mod jwt;
mod middleware;
mod password;

pub use jwt::{Identity, JwtKeys, TokenService};
pub use middleware::{
    authorize, locate_token, require_token, strip_bearer, BearerToken, Decoded, MaybeDecoded,
    Owner, TOKEN_HEADER, TOKEN_QUERY_PARAM,
};
pub use password::PasswordService;
