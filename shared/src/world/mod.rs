pub mod component;
pub mod entity;
pub mod entity_id_generator;
pub mod error;
pub mod known_entities;
