//! A minimal scalar reverse-mode autograd engine and a small library for building
//! feed-forward neural networks on top of it.

pub mod backprop_fns;
pub mod dataloader;
pub mod datasets;
pub mod gradcheck;
pub mod loss;
pub mod nn;
pub mod ops;
pub mod optim;
pub mod values;
