use sqlx::{Encode, QueryBuilder, Sqlite, Type};

/// Builds `UPDATE <table> SET col = ?, ... WHERE id = ?` from the columns a
/// patch actually carries.
pub struct Patch<'args> {
    query: QueryBuilder<'args, Sqlite>,
    columns: usize,
}

impl<'args> Patch<'args> {
    pub fn new(table: &str) -> Self {
        Self {
            query: QueryBuilder::new(format!("UPDATE {} SET ", table)),
            columns: 0,
        }
    }

    pub fn set<T>(&mut self, column: &str, value: Option<T>) -> &mut Self
    where
        T: 'args + Encode<'args, Sqlite> + Type<Sqlite> + Send,
    {
        if let Some(value) = value {
            if self.columns > 0 {
                self.query.push(", ");
            }
            self.query.push(column).push(" = ").push_bind(value);
            self.columns += 1;
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.columns == 0
    }

    /// Finishes the statement, scoped to `id` and, for top-level rows, to the
    /// owning user.
    pub fn finish(mut self, id: i64, owner: Option<i64>) -> QueryBuilder<'args, Sqlite> {
        self.query.push(" WHERE id = ").push_bind(id);
        if let Some(user_id) = owner {
            self.query.push(" AND user_id = ").push_bind(user_id);
        }
        self.query
    }
}

/// Appends `(?, ?, ...)` for an `IN` list.
pub fn push_id_list(query: &mut QueryBuilder<'_, Sqlite>, ids: &[i64]) {
    query.push("(");
    let mut separated = query.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");
}
