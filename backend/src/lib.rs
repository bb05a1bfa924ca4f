pub mod catalog;
pub mod config;
pub mod console;
pub mod model;
pub mod normalize;
pub mod predictor;
pub mod routes;
pub mod state;
pub mod training;
