// Route modules organization

pub mod bridge_routes;

pub use bridge_routes::*;
