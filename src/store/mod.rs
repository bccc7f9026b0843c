pub mod sharded;
