pub mod field_set;
pub mod hooks;
pub mod interceptor;
pub mod policy;
pub mod storage;
pub mod submission;
pub mod upload_service;
