use chess::{Board, BoardStatus, ChessMove, MoveGen, Piece, Square, EMPTY};
use std::str::FromStr;

use crate::models::game_session::{position_key, Color, TerminationReason};
use crate::models::requests::{PromotionPiece, UciMove};
use crate::services::errors::chess_service_errors::ChessServiceError;

/// Result of a legal move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMove {
    pub fen: String,
    pub side_to_move: Color,
    pub terminal: Option<TerminationReason>,
}

pub trait RulesEngine: Send + Sync {
    /// Reads a position, failing when it cannot be parsed. Returns the side to move.
    fn load(&self, fen: &str) -> Result<Color, ChessServiceError>;

    fn is_pawn_of(&self, fen: &str, square: &str, color: Color) -> Result<bool, ChessServiceError>;

    /// Plays `mv` on `fen`. `Ok(None)` when the move is illegal. `position_history` holds the
    /// repetition keys of earlier positions.
    fn apply_move(
        &self,
        fen: &str,
        mv: &UciMove,
        position_history: &[String],
    ) -> Result<Option<AppliedMove>, ChessServiceError>;
}

#[derive(Clone, Default)]
pub struct ChessService;

struct Counters {
    halfmove: u32,
    fullmove: u32,
}

impl ChessService {
    pub fn new() -> Self {
        ChessService
    }

    fn parse(fen: &str) -> Result<(Board, Counters), ChessServiceError> {
        let board = Board::from_str(fen)
            .map_err(|e| ChessServiceError::InvalidPosition(format!("Invalid FEN: {}", e)))?;

        let mut fields = fen.split_whitespace().skip(4);
        let mut counter = |default: u32| -> Result<u32, ChessServiceError> {
            match fields.next() {
                Some(field) => field.parse().map_err(|_| {
                    ChessServiceError::InvalidPosition(format!("Invalid move counter: {}", field))
                }),
                None => Ok(default),
            }
        };
        let halfmove = counter(0)?;
        let fullmove = counter(1)?;

        Ok((board, Counters { halfmove, fullmove }))
    }

    /// The chess crate does not track move counters; keep its first four fields and append ours.
    fn to_fen(board: &Board, counters: &Counters) -> String {
        let rendered = board.to_string();
        format!(
            "{} {} {}",
            position_key(&rendered),
            counters.halfmove,
            counters.fullmove
        )
    }

    fn square(square: &str) -> Result<Square, ChessServiceError> {
        Square::from_str(square).map_err(|_| ChessServiceError::InvalidSquare(square.to_string()))
    }

    fn promotion(piece: PromotionPiece) -> Piece {
        match piece {
            PromotionPiece::Queen => Piece::Queen,
            PromotionPiece::Rook => Piece::Rook,
            PromotionPiece::Bishop => Piece::Bishop,
            PromotionPiece::Knight => Piece::Knight,
        }
    }

    fn insufficient_material(board: &Board) -> bool {
        let heavy = *board.pieces(Piece::Pawn) | *board.pieces(Piece::Rook) | *board.pieces(Piece::Queen);
        if heavy != EMPTY {
            return false;
        }
        let knights = *board.pieces(Piece::Knight);
        let bishops = *board.pieces(Piece::Bishop);
        if (knights | bishops).popcnt() <= 1 {
            return true;
        }
        if knights != EMPTY {
            return false;
        }
        // Bishops only: a draw when they all stand on squares of one colour.
        let mut shades = bishops.map(|sq| (sq.get_rank().to_index() + sq.get_file().to_index()) % 2);
        match shades.next() {
            Some(first) => shades.all(|shade| shade == first),
            None => true,
        }
    }

    fn classify(
        board: &Board,
        counters: &Counters,
        key: &str,
        position_history: &[String],
    ) -> Option<TerminationReason> {
        match board.status() {
            BoardStatus::Checkmate => return Some(TerminationReason::Checkmate),
            BoardStatus::Stalemate => return Some(TerminationReason::Stalemate),
            BoardStatus::Ongoing => {}
        }
        if Self::insufficient_material(board) {
            return Some(TerminationReason::InsufficientMaterial);
        }
        let repetitions = position_history.iter().filter(|seen| *seen == key).count() + 1;
        if repetitions >= 3 {
            return Some(TerminationReason::ThreefoldRepetition);
        }
        if counters.halfmove >= 100 {
            return Some(TerminationReason::FiftyMoveRule);
        }
        None
    }
}

fn to_color(color: chess::Color) -> Color {
    match color {
        chess::Color::White => Color::White,
        chess::Color::Black => Color::Black,
    }
}

impl RulesEngine for ChessService {
    fn load(&self, fen: &str) -> Result<Color, ChessServiceError> {
        let (board, _) = Self::parse(fen)?;
        Ok(to_color(board.side_to_move()))
    }

    fn is_pawn_of(&self, fen: &str, square: &str, color: Color) -> Result<bool, ChessServiceError> {
        let (board, _) = Self::parse(fen)?;
        let square = Self::square(square)?;
        Ok(board.piece_on(square) == Some(Piece::Pawn)
            && board.color_on(square).map(to_color) == Some(color))
    }

    fn apply_move(
        &self,
        fen: &str,
        mv: &UciMove,
        position_history: &[String],
    ) -> Result<Option<AppliedMove>, ChessServiceError> {
        let (board, counters) = Self::parse(fen)?;
        let from = Self::square(&mv.from)?;
        let to = Self::square(&mv.to)?;
        let chess_move = ChessMove::new(from, to, mv.promotion.map(Self::promotion));

        let legal_moves: Vec<ChessMove> = MoveGen::new_legal(&board).collect();
        if !legal_moves.contains(&chess_move) {
            return Ok(None);
        }

        let resets_halfmove = board.piece_on(from) == Some(Piece::Pawn) || board.piece_on(to).is_some();
        let mover = board.side_to_move();
        let new_board = board.make_move_new(chess_move);
        let counters = Counters {
            halfmove: if resets_halfmove { 0 } else { counters.halfmove + 1 },
            fullmove: if mover == chess::Color::Black {
                counters.fullmove + 1
            } else {
                counters.fullmove
            },
        };

        let fen = Self::to_fen(&new_board, &counters);
        let terminal = Self::classify(&new_board, &counters, &position_key(&fen), position_history);

        Ok(Some(AppliedMove {
            fen,
            side_to_move: to_color(new_board.side_to_move()),
            terminal,
        }))
    }
}
