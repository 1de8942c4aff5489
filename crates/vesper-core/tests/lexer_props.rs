//! Property tests for the lexer: arbitrary input must never panic or hang,
//! spans must stay in bounds and monotonic, and the peek/save-restore
//! contracts must hold on every prefix of the token stream.

use proptest::prelude::*;

use vesper_core::diagnostics::DiagnosticEngine;
use vesper_core::lexer::{Lexer, TokenKind};

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        .. ProptestConfig::default()
    })]

    #[test]
    fn never_panics_and_spans_are_monotonic(s in ".*") {
        let mut diag = DiagnosticEngine::silent();
        let tokens = Lexer::new(&s, "fuzz.vsp").lex_all(&mut diag);

        // The stream always ends with exactly one EOF
        prop_assert!(!tokens.is_empty());
        prop_assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);
        prop_assert_eq!(
            tokens.iter().filter(|t| t.kind == TokenKind::Eof).count(),
            1
        );

        // Spans are in-bounds half-open ranges that never move backwards
        let mut last_end = 0u32;
        for token in &tokens {
            prop_assert!(
                token.span.start <= token.span.end,
                "start > end: {:?} in {s:?}",
                token
            );
            prop_assert!(
                token.span.end as usize <= s.len(),
                "span out of bounds: {:?} len={} in {s:?}",
                token,
                s.len()
            );
            prop_assert!(
                token.span.start >= last_end,
                "token moved backwards: {:?} after offset {last_end} in {s:?}",
                token
            );
            last_end = token.span.end;
        }

        // The EOF token sits at the end of the buffer
        prop_assert_eq!(tokens.last().unwrap().span.end as usize, s.len());

        // Anti-hang: every non-EOF token consumes at least one byte
        prop_assert!(tokens.len() <= s.len() + 1, "too many tokens for {s:?}");
    }

    #[test]
    fn token_spans_and_gaps_reconstruct_the_source(s in ".*") {
        let mut diag = DiagnosticEngine::silent();
        let tokens = Lexer::new(&s, "fuzz.vsp").lex_all(&mut diag);

        // Interleaving the skipped whitespace/comment gaps with the token
        // spans rebuilds the input byte-for-byte
        let mut rebuilt = String::new();
        let mut pos = 0usize;
        for token in &tokens {
            rebuilt.push_str(&s[pos..token.span.start as usize]);
            rebuilt.push_str(&s[token.span.as_range()]);
            pos = token.span.end as usize;
        }
        rebuilt.push_str(&s[pos..]);
        prop_assert_eq!(rebuilt, s);
    }

    #[test]
    fn peek_is_idempotent_and_matches_next(s in ".*") {
        let mut diag = DiagnosticEngine::silent();
        let mut lexer = Lexer::new(&s, "fuzz.vsp");

        let mut steps = 0usize;
        loop {
            let first = lexer.peek_token(&mut diag);
            let second = lexer.peek_token(&mut diag);
            prop_assert_eq!(&first, &second);

            let consumed = lexer.next_token(&mut diag);
            prop_assert_eq!(&consumed, &first);

            if consumed.kind == TokenKind::Eof {
                break;
            }
            steps += 1;
            prop_assert!(steps <= s.len() + 1, "lexer made no progress on {s:?}");
        }
    }

    #[test]
    fn save_restore_replays_the_same_stream(s in ".*", skip in 0usize..8) {
        let mut diag = DiagnosticEngine::silent();
        let mut lexer = Lexer::new(&s, "fuzz.vsp");

        for _ in 0..skip {
            if lexer.next_token(&mut diag).kind == TokenKind::Eof {
                break;
            }
        }

        let state = lexer.save_state();

        let mut first_run = Vec::new();
        loop {
            let token = lexer.next_token(&mut diag);
            let done = token.kind == TokenKind::Eof;
            first_run.push(token);
            if done {
                break;
            }
        }

        lexer.restore_state(&state);

        let mut second_run = Vec::new();
        loop {
            let token = lexer.next_token(&mut diag);
            let done = token.kind == TokenKind::Eof;
            second_run.push(token);
            if done {
                break;
            }
        }

        prop_assert_eq!(first_run, second_run);
    }
}
