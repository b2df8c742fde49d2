//! DTO, общие для HTTP-поверхности загрузчика тендеров

pub mod shared;
pub mod system;
pub mod usecases;
