mod extraction;
mod fetch_cache;
mod session;
mod support;
mod translation;
