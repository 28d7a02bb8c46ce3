#[cfg(test)]
mod common;

#[cfg(test)]
mod end_to_end_test;
