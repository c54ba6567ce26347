pub mod destination;
pub mod row;
