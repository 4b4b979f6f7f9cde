mod memory;

pub use memory::InMemoryResultSink;
