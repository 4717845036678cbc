pub mod scanner;
pub mod txin;
pub mod txout;
