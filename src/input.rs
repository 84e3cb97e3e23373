// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A stateful cursor over raw command-line text.
//!
//! [`CommandInput`] is deliberately a thin wrapper around a `String` and a
//! byte offset: it does no tokenizing up front and allocates nothing beyond
//! the backing string. Parsers advance the cursor as they consume text;
//! a failed parse attempt must restore the cursor to where it started
//! (see [`CommandInput::cursor`] / [`CommandInput::set_cursor`]).

use std::fmt;

/// Error produced by a cursor read that ran past the end of the input.
#[derive(Debug, Clone, Copy, thiserror::Error, PartialEq, Eq)]
#[error("no more input to read")]
pub struct EndOfInput;

/// A cursor over a line of command input.
///
/// The cursor position is a byte offset into `input` and always lands on a
/// `char` boundary, since all advances go through `char`-aware helpers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandInput {
    input: String,
    cursor: usize,
}

impl CommandInput {
    /// Wrap `input` in a cursor positioned at the start.
    pub fn new(input: impl Into<String>) -> Self {
        CommandInput {
            input: input.into(),
            cursor: 0,
        }
    }

    /// The full backing string, including any already-consumed prefix.
    pub fn input(&self) -> &str {
        &self.input
    }

    /// The text from the cursor to the end of the input.
    pub fn remaining(&self) -> &str {
        &self.input[self.cursor..]
    }

    /// The current cursor position, as a byte offset into [`Self::input`].
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Reposition the cursor. Used to roll back a failed parse attempt.
    ///
    /// # Panics
    ///
    /// Panics if `cursor` does not land on a `char` boundary of `input`, or
    /// is past the end of `input`. Callers should only ever pass back a
    /// value previously returned by [`Self::cursor`].
    pub fn set_cursor(&mut self, cursor: usize) {
        assert!(self.input.is_char_boundary(cursor), "cursor mid-character");
        self.cursor = cursor;
    }

    /// True once the cursor has reached the end of the input.
    pub fn is_empty(&self) -> bool {
        self.cursor >= self.input.len()
    }

    /// Look at the next character without consuming it.
    pub fn peek(&self) -> Result<char, EndOfInput> {
        self.remaining().chars().next().ok_or(EndOfInput)
    }

    /// Consume and return the next character.
    pub fn read(&mut self) -> Result<char, EndOfInput> {
        let c = self.peek()?;
        self.cursor += c.len_utf8();
        Ok(c)
    }

    /// Advance the cursor past any leading whitespace, without otherwise
    /// consuming anything.
    pub fn skip_whitespace(&mut self) {
        let skip: usize = self
            .remaining()
            .chars()
            .take_while(|c| c.is_whitespace())
            .map(char::len_utf8)
            .sum();
        self.cursor += skip;
    }

    /// Skip leading whitespace (without moving the cursor) and return the
    /// token that would be read next, i.e. the characters up to (not
    /// including) the next whitespace. Empty when the input is exhausted.
    /// Does not move the cursor.
    pub fn peek_string(&self) -> &str {
        let rest = self.remaining();
        let start: usize = rest
            .chars()
            .take_while(|c| c.is_whitespace())
            .map(char::len_utf8)
            .sum();
        let token = &rest[start..];
        let end: usize = token
            .chars()
            .take_while(|c| !c.is_whitespace())
            .map(char::len_utf8)
            .sum();
        &token[..end]
    }

    /// Skip leading whitespace, then consume and return the next token.
    /// Trailing whitespace is **not** consumed.
    pub fn read_string(&mut self) -> String {
        self.skip_whitespace();
        let token_len: usize = self
            .remaining()
            .chars()
            .take_while(|c| !c.is_whitespace())
            .map(char::len_utf8)
            .sum();
        let token = self.remaining()[..token_len].to_string();
        self.cursor += token_len;
        token
    }

    /// As [`Self::read_string`], but also consumes any whitespace that
    /// follows the token.
    ///
    /// If consuming that trailing whitespace would leave nothing after the
    /// cursor even though the caller's original text had a trailing space
    /// (e.g. reading `"foo"` out of `"foo "`), pass `preserve_single_space
    /// = true` to leave exactly one space unconsumed. This keeps
    /// [`Self::remaining_tokens`] reporting "awaiting the next token" rather
    /// than "input exhausted", which the suggestion traversal relies on.
    pub fn read_string_skip_whitespace(&mut self, preserve_single_space: bool) -> String {
        let token = self.read_string();
        let had_trailing_space = self.remaining().starts_with(char::is_whitespace);
        self.skip_whitespace();
        if preserve_single_space && had_trailing_space && self.is_empty() {
            self.cursor -= 1;
        }
        token
    }

    /// Split the remaining input on whitespace runs, except that a
    /// remaining input ending in whitespace yields one extra trailing empty
    /// token. This is the signal the tree uses to tell "the user finished
    /// typing X" apart from "the user finished typing X and a space,
    /// awaiting Y" — the latter case has no real words left at all
    /// (`remaining()` is pure whitespace), but still needs a token count of
    /// 1, not 0, so the suggestion traversal treats it as "one awaited
    /// token with an empty prefix".
    pub fn tokenize(&self) -> Vec<&str> {
        let rest = self.remaining();
        if rest.is_empty() {
            return Vec::new();
        }
        let mut tokens: Vec<&str> = rest.split_whitespace().collect();
        if rest.ends_with(char::is_whitespace) {
            tokens.push("");
        }
        tokens
    }

    /// The number of tokens left to read, per [`Self::tokenize`]'s trailing-
    /// space convention.
    pub fn remaining_token_count(&self) -> usize {
        self.tokenize().len()
    }

    /// Return a new `CommandInput` whose backing string is `self.input()`
    /// with `suffix` appended. The cursor position is preserved. Used to
    /// re-feed a parsed default value into the parse traversal as if the
    /// sender had typed it.
    pub fn append_string(&self, suffix: &str) -> CommandInput {
        let mut input = self.input.clone();
        input.push_str(suffix);
        CommandInput {
            input,
            cursor: self.cursor,
        }
    }

    /// An independent copy of this cursor, positioned identically.
    pub fn copy(&self) -> CommandInput {
        self.clone()
    }

    /// Read a token and parse it as an `i64`.
    pub fn read_integer(&mut self) -> Result<i64, NumberFormatError> {
        let token = self.read_string();
        token
            .parse()
            .map_err(|_| NumberFormatError { text: token })
    }

    /// Read a token and parse it as an `f64`.
    pub fn read_float(&mut self) -> Result<f64, NumberFormatError> {
        let token = self.read_string();
        token
            .parse()
            .map_err(|_| NumberFormatError { text: token })
    }

    /// Read a token and parse it as a `bool` (`"true"`/`"false"`).
    pub fn read_boolean(&mut self) -> Result<bool, NumberFormatError> {
        let token = self.read_string();
        token
            .parse()
            .map_err(|_| NumberFormatError { text: token })
    }
}

impl fmt::Display for CommandInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.input)
    }
}

/// A token failed to parse as the requested numeric/boolean primitive.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("'{text}' is not a valid number")]
pub struct NumberFormatError {
    /// The offending token.
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_round_trips_without_trailing_space() {
        let input = CommandInput::new("foo bar baz");
        assert_eq!(input.tokenize().join(" "), "foo bar baz");
    }

    #[test]
    fn tokenize_yields_trailing_empty_token() {
        let input = CommandInput::new("foo bar ");
        let tokens = input.tokenize();
        assert_eq!(tokens, vec!["foo", "bar", ""]);
        assert_eq!(input.remaining_token_count(), 3);
    }

    #[test]
    fn read_string_stops_before_trailing_whitespace() {
        let mut input = CommandInput::new("  foo   bar");
        assert_eq!(input.read_string(), "foo");
        assert_eq!(input.remaining(), "   bar");
    }

    #[test]
    fn read_string_skip_whitespace_consumes_trailing_space() {
        let mut input = CommandInput::new("foo bar");
        assert_eq!(input.read_string_skip_whitespace(false), "foo");
        assert_eq!(input.remaining(), "bar");
    }

    #[test]
    fn preserve_single_space_keeps_awaiting_next_token() {
        let mut input = CommandInput::new("foo ");
        assert_eq!(input.read_string_skip_whitespace(true), "foo");
        assert_eq!(input.remaining(), " ");
        assert_eq!(input.remaining_token_count(), 1);
    }

    #[test]
    fn append_string_preserves_cursor() {
        let mut input = CommandInput::new("foo");
        let _ = input.read_string();
        let appended = input.append_string(" bar");
        assert_eq!(appended.cursor(), input.cursor());
        assert_eq!(appended.input(), "foo bar");
    }

    #[test]
    fn set_cursor_rolls_back_a_failed_attempt() {
        let mut input = CommandInput::new("abc def");
        let mark = input.cursor();
        let _ = input.read_string();
        input.set_cursor(mark);
        assert_eq!(input.remaining(), "abc def");
    }

    #[test]
    fn peek_and_read_fail_at_end_of_input() {
        let mut input = CommandInput::new("");
        assert_eq!(input.peek(), Err(EndOfInput));
        assert_eq!(input.read(), Err(EndOfInput));
    }

    #[test]
    fn peek_string_does_not_move_cursor() {
        let input = CommandInput::new("  hello world");
        assert_eq!(input.peek_string(), "hello");
        assert_eq!(input.cursor(), 0);
    }

    #[test]
    fn typed_readers_fail_with_number_format_error() {
        let mut input = CommandInput::new("not-a-number");
        assert!(input.read_integer().is_err());
    }
}
