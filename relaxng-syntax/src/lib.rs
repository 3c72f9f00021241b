pub mod tree;
pub mod uri;
pub mod xml;
