pub mod ignore;
pub mod tree;
