mod divergence;
mod failures;
mod lifecycle;
mod tcp;
