pub mod audit;
pub mod config;
pub mod db;
pub mod dto;
pub mod entity;
pub mod error;
pub mod invoice;
pub mod jobs;
pub mod mail;
pub mod middleware;
pub mod models;
pub mod policy;
pub mod pricing;
pub mod query;
pub mod response;
pub mod rollback;
pub mod routes;
pub mod services;
pub mod state;
pub mod storage;
pub mod uploads;
