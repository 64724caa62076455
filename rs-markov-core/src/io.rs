use std::collections::VecDeque;
use std::io::{self, BufRead};

/// Lazy iterator over the whitespace-delimited words of a reader.
///
/// - Reads one line at a time
/// - Yields words untouched (no casing or punctuation stripping)
/// - Yields an `Err` if a line cannot be read (I/O failure, invalid UTF-8)
pub struct Tokens<R> {
	reader: R,
	pending: VecDeque<String>,
}

impl<R: BufRead> Tokens<R> {
	pub fn new(reader: R) -> Self {
		Self { reader, pending: VecDeque::new() }
	}
}

impl<R: BufRead> Iterator for Tokens<R> {
	type Item = io::Result<String>;

	fn next(&mut self) -> Option<Self::Item> {
		loop {
			if let Some(token) = self.pending.pop_front() {
				return Some(Ok(token));
			}

			let mut line = String::new();
			match self.reader.read_line(&mut line) {
				Ok(0) => return None,
				Ok(_) => self.pending.extend(line.split_whitespace().map(str::to_owned)),
				Err(e) => return Some(Err(e)),
			}
		}
	}
}
