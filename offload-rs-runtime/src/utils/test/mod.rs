pub mod harness;
pub mod packet_generators;
