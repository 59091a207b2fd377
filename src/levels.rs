use crate::board::{Board, BoardError};
use std::fmt;
use std::fs;
use std::io;

/// Error type for level loading operations.
#[derive(Debug)]
pub enum LevelError {
    /// IO error when reading from file
    Io(io::Error),
    /// Invalid level content
    InvalidLevel(BoardError),
}

impl fmt::Display for LevelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LevelError::Io(err) => write!(f, "IO error: {}", err),
            LevelError::InvalidLevel(err) => write!(f, "Invalid level: {}", err),
        }
    }
}

impl std::error::Error for LevelError {}

impl From<io::Error> for LevelError {
    fn from(err: io::Error) -> Self {
        LevelError::Io(err)
    }
}

impl From<BoardError> for LevelError {
    fn from(err: BoardError) -> Self {
        LevelError::InvalidLevel(err)
    }
}

/// A collection of Sokoban levels in XSB format.
#[derive(Debug)]
pub struct Levels {
    levels: Vec<Board>,
}

impl Levels {
    /// Parse XSB-formatted Sokoban levels from a string.
    ///
    /// The XSB format uses:
    /// - Lines starting with `;` as level separators/comments
    /// - Standard Sokoban characters (#, @, $, ., *, +, space)
    /// - Empty lines between levels (optional)
    pub fn from_text(contents: &str) -> Result<Self, LevelError> {
        let mut levels = Vec::new();
        let mut current_level = String::new();

        for line in contents.lines() {
            // Skip comment lines (level separators)
            if line.trim_start().starts_with(';') {
                if !current_level.is_empty() {
                    levels.push(Board::from_text(current_level.trim_end())?);
                    current_level.clear();
                }
                continue;
            }

            if line.is_empty() {
                if !current_level.is_empty() {
                    levels.push(Board::from_text(current_level.trim_end())?);
                    current_level.clear();
                }
                continue;
            }

            current_level.push_str(line);
            current_level.push('\n');
        }

        // The last level may not be terminated by an empty line
        if !current_level.is_empty() {
            levels.push(Board::from_text(current_level.trim_end())?);
        }

        Ok(Levels { levels })
    }

    /// Parse XSB-formatted Sokoban levels from a text file.
    pub fn from_file(path: &str) -> Result<Self, LevelError> {
        let contents = fs::read_to_string(path)?;
        Self::from_text(&contents)
    }

    /// Get the nth level (0-indexed).
    pub fn get(&self, index: usize) -> Option<&Board> {
        self.levels.get(index)
    }

    /// Get the number of levels.
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_text_basic() {
        let level1 = "####
# .#
#  ###
#*@  #
#  $ #
#  ###
####";

        let level2 = "######
#    #
# #@ #
# $* #
# .* #
#    #
######";

        let level3 = "  ####
###  ####
#     $ #
# #  #$ #
# . .#@ #
#########";

        let xsb_content = format!(
            "; 1\n\n{}\n\n; 2\n\n{}\n\n; 3\n\n{}\n",
            level1, level2, level3
        );

        let levels = Levels::from_text(&xsb_content).unwrap();

        assert_eq!(levels.len(), 3);

        // Verify levels match the original strings when formatted back
        assert_eq!(levels.get(0).unwrap().to_string().trim_end(), level1);
        assert_eq!(levels.get(1).unwrap().to_string().trim_end(), level2);
        assert_eq!(levels.get(2).unwrap().to_string().trim_end(), level3);
    }

    #[test]
    fn test_from_text_invalid_level() {
        let xsb_content = "; 1

####
# .#
#@@  #
####
";

        let result = Levels::from_text(xsb_content);
        assert!(matches!(
            result.unwrap_err(),
            LevelError::InvalidLevel(_)
        ));
    }

    #[test]
    fn test_from_file_no_file() {
        let result = Levels::from_file("nonexistent_file.xsb");
        assert!(matches!(result.unwrap_err(), LevelError::Io(_)));
    }
}
