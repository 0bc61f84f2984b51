mod binary;
mod lifecycle;
mod persistence;
mod roi;
mod rules;
