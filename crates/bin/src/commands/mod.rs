pub mod columns;
pub mod records;
