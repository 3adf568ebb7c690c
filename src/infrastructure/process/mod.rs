pub mod locate;
pub mod runner;

#[cfg(test)]
pub mod fake;
