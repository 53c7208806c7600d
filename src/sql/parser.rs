//! SQL parser
//!
//! A recursive-descent parser over the token stream. WHERE clauses bind
//! `OR` loosest, then `AND`, then comparisons; parentheses override.

use super::ast::*;
use super::lexer::Lexer;
use super::token::Token;
use crate::error::{Error, Result};

/// SQL parser
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    /// Tokenize `input` and build a parser over it.
    pub fn new(input: &str) -> Result<Self> {
        let tokens = Lexer::new(input).tokenize()?;
        Ok(Self {
            tokens,
            position: 0,
        })
    }

    /// Parse one complete statement. Trailing semicolons are accepted.
    pub fn parse(&mut self) -> Result<Statement> {
        let statement = match self.peek().clone() {
            Token::Create => self.parse_create()?,
            Token::Drop => self.parse_drop()?,
            Token::Insert => self.parse_insert()?,
            Token::Select => self.parse_select()?,
            Token::Update => self.parse_update()?,
            Token::Delete => self.parse_delete()?,
            Token::Begin => {
                self.advance();
                // BEGIN TRANSACTION is the same statement.
                if *self.peek() == Token::Transaction {
                    self.advance();
                }
                Statement::Begin
            }
            Token::Start => {
                self.advance();
                self.expect(Token::Transaction, "TRANSACTION")?;
                Statement::Begin
            }
            Token::Commit => {
                self.advance();
                Statement::Commit
            }
            Token::Rollback => {
                self.advance();
                Statement::Rollback
            }
            other => {
                return Err(Error::UnexpectedToken {
                    expected: "a statement".to_string(),
                    found: other.to_string(),
                })
            }
        };

        if *self.peek() == Token::Semicolon {
            self.advance();
        }
        self.expect(Token::Eof, "end of statement")?;
        Ok(statement)
    }

    fn parse_create(&mut self) -> Result<Statement> {
        self.expect(Token::Create, "CREATE")?;
        match self.peek().clone() {
            Token::Table => {
                self.advance();
                let table_name = self.identifier("table name")?;
                self.expect(Token::LParen, "(")?;

                let mut columns = Vec::new();
                loop {
                    let name = self.identifier("column name")?;
                    let type_name = self.identifier("column type")?;
                    columns.push(ColumnDef { name, type_name });

                    if *self.peek() == Token::Comma {
                        self.advance();
                    } else {
                        break;
                    }
                }
                self.expect(Token::RParen, ")")?;

                Ok(Statement::CreateTable(CreateTableStatement {
                    table_name,
                    columns,
                }))
            }
            Token::Index => {
                self.advance();
                let index_name = self.identifier("index name")?;
                self.expect(Token::On, "ON")?;
                let table_name = self.identifier("table name")?;
                self.expect(Token::LParen, "(")?;
                let column_name = self.identifier("column name")?;
                self.expect(Token::RParen, ")")?;

                Ok(Statement::CreateIndex(CreateIndexStatement {
                    index_name,
                    table_name,
                    column_name,
                }))
            }
            other => Err(Error::UnexpectedToken {
                expected: "TABLE or INDEX".to_string(),
                found: other.to_string(),
            }),
        }
    }

    fn parse_drop(&mut self) -> Result<Statement> {
        self.expect(Token::Drop, "DROP")?;
        match self.peek().clone() {
            Token::Table => {
                self.advance();
                let table_name = self.identifier("table name")?;
                Ok(Statement::DropTable(DropTableStatement { table_name }))
            }
            Token::Index => {
                self.advance();
                let index_name = self.identifier("index name")?;
                Ok(Statement::DropIndex(DropIndexStatement { index_name }))
            }
            other => Err(Error::UnexpectedToken {
                expected: "TABLE or INDEX".to_string(),
                found: other.to_string(),
            }),
        }
    }

    fn parse_insert(&mut self) -> Result<Statement> {
        self.expect(Token::Insert, "INSERT")?;
        self.expect(Token::Into, "INTO")?;
        let table_name = self.identifier("table name")?;
        self.expect(Token::Values, "VALUES")?;

        let mut rows = Vec::new();
        loop {
            self.expect(Token::LParen, "(")?;
            let mut values = Vec::new();
            loop {
                values.push(self.literal()?);
                if *self.peek() == Token::Comma {
                    self.advance();
                } else {
                    break;
                }
            }
            self.expect(Token::RParen, ")")?;
            rows.push(values);

            if *self.peek() == Token::Comma {
                self.advance();
            } else {
                break;
            }
        }

        Ok(Statement::Insert(InsertStatement { table_name, rows }))
    }

    fn parse_select(&mut self) -> Result<Statement> {
        self.expect(Token::Select, "SELECT")?;

        let projection = if *self.peek() == Token::Asterisk {
            self.advance();
            Projection::All
        } else {
            let mut columns = Vec::new();
            loop {
                columns.push(self.identifier("column name")?);
                if *self.peek() == Token::Comma {
                    self.advance();
                } else {
                    break;
                }
            }
            Projection::Columns(columns)
        };

        self.expect(Token::From, "FROM")?;
        let table_name = self.identifier("table name")?;
        let where_clause = self.parse_optional_where()?;

        Ok(Statement::Select(SelectStatement {
            projection,
            table_name,
            where_clause,
        }))
    }

    fn parse_update(&mut self) -> Result<Statement> {
        self.expect(Token::Update, "UPDATE")?;
        let table_name = self.identifier("table name")?;
        self.expect(Token::Set, "SET")?;

        let mut assignments = Vec::new();
        loop {
            let column = self.identifier("column name")?;
            self.expect(Token::Eq, "=")?;
            let value = self.literal()?;
            assignments.push(Assignment { column, value });

            if *self.peek() == Token::Comma {
                self.advance();
            } else {
                break;
            }
        }

        let where_clause = self.parse_optional_where()?;
        Ok(Statement::Update(UpdateStatement {
            table_name,
            assignments,
            where_clause,
        }))
    }

    fn parse_delete(&mut self) -> Result<Statement> {
        self.expect(Token::Delete, "DELETE")?;
        self.expect(Token::From, "FROM")?;
        let table_name = self.identifier("table name")?;
        let where_clause = self.parse_optional_where()?;

        Ok(Statement::Delete(DeleteStatement {
            table_name,
            where_clause,
        }))
    }

    fn parse_optional_where(&mut self) -> Result<Option<Expr>> {
        if *self.peek() == Token::Where {
            self.advance();
            Ok(Some(self.parse_or()?))
        } else {
            Ok(None)
        }
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_and()?;
        while *self.peek() == Token::Or {
            self.advance();
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_comparison()?;
        while *self.peek() == Token::And {
            self.advance();
            let right = self.parse_comparison()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        if *self.peek() == Token::LParen {
            self.advance();
            let expr = self.parse_or()?;
            self.expect(Token::RParen, ")")?;
            return Ok(expr);
        }

        let column = self.identifier("column name")?;
        let op = match self.peek() {
            Token::Eq => CompareOp::Eq,
            Token::Neq => CompareOp::Neq,
            Token::Lt => CompareOp::Lt,
            Token::Lte => CompareOp::Lte,
            Token::Gt => CompareOp::Gt,
            Token::Gte => CompareOp::Gte,
            other => {
                return Err(Error::UnexpectedToken {
                    expected: "a comparison operator".to_string(),
                    found: other.to_string(),
                })
            }
        };
        self.advance();
        let value = self.literal()?;

        Ok(Expr::Comparison { column, op, value })
    }

    fn literal(&mut self) -> Result<Literal> {
        let literal = match self.peek().clone() {
            Token::IntegerLiteral(v) => Literal::Integer(v),
            Token::FloatLiteral(v) => Literal::Float(v),
            Token::StringLiteral(s) => Literal::String(s),
            Token::True => Literal::Boolean(true),
            Token::False => Literal::Boolean(false),
            other => {
                return Err(Error::UnexpectedToken {
                    expected: "a literal value".to_string(),
                    found: other.to_string(),
                })
            }
        };
        self.advance();
        Ok(literal)
    }

    fn identifier(&mut self, expected: &str) -> Result<String> {
        match self.peek().clone() {
            Token::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(Error::UnexpectedToken {
                expected: expected.to_string(),
                found: other.to_string(),
            }),
        }
    }

    fn expect(&mut self, token: Token, expected: &str) -> Result<()> {
        if *self.peek() == token {
            self.advance();
            Ok(())
        } else {
            Err(Error::UnexpectedToken {
                expected: expected.to_string(),
                found: self.peek().to_string(),
            })
        }
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.position).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) {
        self.position += 1;
    }
}
