pub mod assembler;
pub mod cache;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod image_features;
pub mod pipeline;
pub mod preprocessing;
pub mod resnet;
pub mod triplets;
