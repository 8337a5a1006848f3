mod access;
mod fusion;
