use crate::cursor::Cursor;
use crate::token::Token;

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic()
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Lexes `[A-Za-z][A-Za-z0-9_]*`, then resolves reserved words (spec.md
/// §4.1). `exit` is not a reserved word here — it lexes as a plain
/// `Identifier` and the caller (`Lexer::scan`) special-cases it to
/// terminate the process immediately, matching the historical quirk of
/// the language this grammar descends from.
pub fn lex_identifier(cursor: &mut Cursor<'_>) -> Token {
    let mut lexeme = String::new();
    while is_ident_continue(cursor.current()) {
        lexeme.push(cursor.advance() as char);
    }

    match lexeme.as_str() {
        "def" => Token::Def,
        "extern" => Token::Extern,
        "if" => Token::If,
        "then" => Token::Then,
        "else" => Token::Else,
        "for" => Token::For,
        "in" => Token::In,
        "binary" => Token::Binary,
        "unary" => Token::Unary,
        "var" => Token::Var,
        "int" => Token::TyInt,
        "float" => Token::TyFloat,
        "bool" => Token::TyBool,
        "void" => Token::TyVoid,
        _ => Token::Identifier(lexeme),
    }
}

pub fn starts_identifier(b: u8) -> bool {
    is_ident_start(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_resolve_to_dedicated_tokens() {
        let mut cursor = Cursor::new("def");
        assert_eq!(lex_identifier(&mut cursor), Token::Def);
    }

    #[test]
    fn plain_identifier_keeps_its_lexeme() {
        let mut cursor = Cursor::new("counter_1");
        assert_eq!(lex_identifier(&mut cursor), Token::Identifier("counter_1".to_string()));
    }
}
