//! 通用数据库网关库
//! 登录签发会话令牌，按白名单对单表执行参数化的增删改查

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod policy;
pub mod repository;
pub mod routes;
pub mod services;
pub mod statement;
pub mod telemetry;
