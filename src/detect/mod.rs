mod crossing;

pub use crossing::{CrossingEvent, CrossingSource, DetectorParams, KnotDetector};
