mod graph;
mod properties;
mod scenarios;
