// LanceDB-backed vector index over the book catalog
// One entry per catalog record, keyed by the same title used for summary
// lookup. The only refresh mechanism is a full rebuild.


use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType};
use tracing::{debug, info, warn};

use crate::catalog::{Book, Catalog};
use crate::config::Config;
use crate::openai::Embedder;
use crate::{LibrarianError, Result};

/// One normalized retrieval result.
#[derive(Debug, Clone)]
pub struct Retrieved {
    pub id: String,
    pub document: String,
    pub title: String,
    /// Themes flattened to a comma-delimited string, as stored.
    pub themes: String,
    pub distance: Option<f32>,
    /// `1 - distance` when a distance was returned.
    pub score: Option<f32>,
}

pub struct BookIndex {
    connection: Connection,
    table_name: String,
}

/// Deterministic id for the n-th catalog record (1-based).
#[inline]
pub fn record_id(ordinal: usize, title: &str) -> String {
    format!("book-{:03}-{}", ordinal, title)
}

/// The text block handed to the embedding provider for one book.
#[inline]
pub fn document_for(book: &Book) -> String {
    format!(
        "Titlu: {}\nTeme: {}\nRezumat scurt: {}\n",
        book.title,
        book.themes.join(", "),
        book.short_summary
    )
}

impl BookIndex {
    /// Connect to the vector store at the configured path, creating the
    /// directory if needed. Does not build anything yet.
    #[inline]
    pub async fn open(config: &Config) -> Result<Self> {
        let uri = store_uri(&config.store_path)?;
        debug!("Connecting to vector store at {}", uri);

        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| LibrarianError::Database(format!("Failed to connect: {}", e)))?;

        Ok(Self {
            connection,
            table_name: config.collection.clone(),
        })
    }

    /// Ensure the index is populated, embedding and inserting the whole
    /// catalog when the table is missing, empty, or a rebuild was asked
    /// for. Idempotent otherwise: a populated table is left untouched.
    #[inline]
    pub async fn build_or_load<E: Embedder + ?Sized>(
        &self,
        embedder: &E,
        catalog: &Catalog,
        rebuild: bool,
    ) -> Result<()> {
        if rebuild {
            // A failed drop (e.g. the table never existed) must not block
            // the rebuild; it is logged and otherwise ignored.
            if let Err(e) = self.drop_table_if_exists().await {
                warn!("Ignoring failure to drop collection on rebuild: {}", e);
            }
        }

        if self.table_exists().await? {
            let count = self.count().await?;
            if count > 0 {
                debug!("Index already populated ({} entries), skipping build", count);
                return Ok(());
            }
            // An empty table may carry a stale vector dimension; recreate it.
            self.drop_table_if_exists().await?;
        }

        if catalog.is_empty() {
            warn!("Catalog is empty, nothing to index");
            return Ok(());
        }

        let documents: Vec<String> = catalog.books().iter().map(document_for).collect();
        let vectors = embedder.embed_batch(&documents)?;
        let dim = vectors
            .first()
            .map(Vec::len)
            .ok_or_else(|| LibrarianError::Provider("Empty embedding response".to_string()))?;

        let schema = self.schema(dim);
        self.connection
            .create_empty_table(&self.table_name, Arc::clone(&schema))
            .execute()
            .await
            .map_err(|e| LibrarianError::Database(format!("Failed to create table: {}", e)))?;

        let batch = self.record_batch(catalog.books(), &documents, &vectors, dim, &schema)?;
        let table = self.open_table().await?;
        let reader = RecordBatchIterator::new(std::iter::once(Ok(batch)), schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| LibrarianError::Database(format!("Failed to insert records: {}", e)))?;

        info!("Indexed {} books into '{}'", catalog.len(), self.table_name);
        Ok(())
    }

    /// Nearest-neighbor search for the top-k matches to a question.
    /// Bounds on `k` are the caller's responsibility.
    #[inline]
    pub async fn search<E: Embedder + ?Sized>(
        &self,
        embedder: &E,
        question: &str,
        k: usize,
    ) -> Result<Vec<Retrieved>> {
        if !self.table_exists().await? {
            warn!("Search before any index build, returning no results");
            return Ok(Vec::new());
        }

        let query_vector = embedder.embed(question)?;
        let table = self.open_table().await?;

        let mut stream = table
            .vector_search(query_vector.as_slice())
            .map_err(|e| LibrarianError::Database(format!("Failed to build search: {}", e)))?
            .distance_type(DistanceType::Cosine)
            .column("vector")
            .limit(k)
            .execute()
            .await
            .map_err(|e| LibrarianError::Database(format!("Failed to execute search: {}", e)))?;

        let mut results = Vec::new();
        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(|e| LibrarianError::Database(format!("Failed to read results: {}", e)))?
        {
            results.extend(parse_search_batch(&batch)?);
        }

        debug!("Retrieved {} results for question", results.len());
        Ok(results)
    }

    /// Number of indexed entries; zero when the table does not exist yet.
    #[inline]
    pub async fn count(&self) -> Result<usize> {
        if !self.table_exists().await? {
            return Ok(0);
        }
        let table = self.open_table().await?;
        table
            .count_rows(None)
            .await
            .map_err(|e| LibrarianError::Database(format!("Failed to count rows: {}", e)))
    }

    async fn table_exists(&self) -> Result<bool> {
        let names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| LibrarianError::Database(format!("Failed to list tables: {}", e)))?;
        Ok(names.contains(&self.table_name))
    }

    async fn open_table(&self) -> Result<lancedb::Table> {
        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| LibrarianError::Database(format!("Failed to open table: {}", e)))
    }

    async fn drop_table_if_exists(&self) -> Result<()> {
        if self.table_exists().await? {
            info!("Dropping collection '{}'", self.table_name);
            self.connection
                .drop_table(&self.table_name)
                .await
                .map_err(|e| LibrarianError::Database(format!("Failed to drop table: {}", e)))?;
        }
        Ok(())
    }

    fn schema(&self, vector_dim: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    vector_dim as i32,
                ),
                false,
            ),
            Field::new("title", DataType::Utf8, false),
            Field::new("themes", DataType::Utf8, false),
            Field::new("document", DataType::Utf8, false),
        ]))
    }

    fn record_batch(
        &self,
        books: &[Book],
        documents: &[String],
        vectors: &[Vec<f32>],
        vector_dim: usize,
        schema: &Arc<Schema>,
    ) -> Result<RecordBatch> {
        let len = books.len();
        let mut ids = Vec::with_capacity(len);
        let mut titles = Vec::with_capacity(len);
        let mut themes = Vec::with_capacity(len);

        for (i, book) in books.iter().enumerate() {
            ids.push(record_id(i + 1, &book.title));
            titles.push(book.title.as_str());
            // The store only takes scalar metadata, so themes are flattened.
            themes.push(book.themes.join(", "));
        }

        let mut flat_values = Vec::with_capacity(len * vector_dim);
        for vector in vectors {
            if vector.len() != vector_dim {
                return Err(LibrarianError::Provider(format!(
                    "Inconsistent embedding dimensions: {} vs {}",
                    vector.len(),
                    vector_dim
                )));
            }
            flat_values.extend_from_slice(vector);
        }
        let values_array = Float32Array::from(flat_values);
        let item_field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array = FixedSizeListArray::try_new(
            item_field,
            vector_dim as i32,
            Arc::new(values_array),
            None,
        )
        .map_err(|e| LibrarianError::Database(format!("Failed to build vector array: {}", e)))?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(titles)),
            Arc::new(StringArray::from(themes)),
            Arc::new(StringArray::from(
                documents.iter().map(String::as_str).collect::<Vec<_>>(),
            )),
        ];

        RecordBatch::try_new(Arc::clone(schema), arrays)
            .map_err(|e| LibrarianError::Database(format!("Failed to build record batch: {}", e)))
    }
}

fn store_uri(path: &Path) -> Result<String> {
    std::fs::create_dir_all(path).map_err(|e| {
        LibrarianError::Database(format!(
            "Failed to create vector store directory {}: {}",
            path.display(),
            e
        ))
    })?;
    let absolute = std::fs::canonicalize(path).map_err(|e| {
        LibrarianError::Database(format!(
            "Failed to resolve vector store path {}: {}",
            path.display(),
            e
        ))
    })?;
    Ok(format!("file://{}", absolute.display()))
}

fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<Retrieved>> {
    let ids = string_column(batch, "id")?;
    let titles = string_column(batch, "title")?;
    let themes = string_column(batch, "themes")?;
    let documents = string_column(batch, "document")?;

    let distances = batch
        .column_by_name("_distance")
        .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

    let mut results = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let distance = distances.and_then(|d| (!d.is_null(row)).then(|| d.value(row)));
        results.push(Retrieved {
            id: ids.value(row).to_string(),
            document: documents.value(row).to_string(),
            title: titles.value(row).to_string(),
            themes: themes.value(row).to_string(),
            distance,
            score: distance.map(|d| 1.0 - d),
        });
    }
    Ok(results)
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| LibrarianError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| LibrarianError::Database(format!("Invalid {} column type", name)))
}
