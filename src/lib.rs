pub mod batch;
pub mod execute;
pub mod judge;
pub mod response;
pub mod score;
pub mod script;
pub mod sexpr;
pub mod solver;
pub mod theory;

#[cfg(test)]
mod tests;
