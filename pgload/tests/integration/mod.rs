mod benchmark_test;
mod loader_test;
mod postgres_test;
