mod boundary;
mod element;
mod geometry;
