mod engine;
mod routing;
