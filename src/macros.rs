/// Construye un [`Metadata`](crate::ir::Metadata) a partir de pares clave-valor.
macro_rules! metadata {
    ($($key:expr => $value:expr),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut metadata = $crate::ir::Metadata::default();
        $(metadata.insert($key, $value);)*
        metadata
    }};
}

/// Emite una línea de traza con sus campos `KEY=valor`, omitiendo los ausentes.
macro_rules! emit {
    ($output:expr, $instruction:expr, $head:expr; $($label:literal => $key:expr),* $(,)?) => {{
        write!($output, "{}", $head)?;
        $(
            if let Some(value) = $instruction.metadata.get($key) {
                write!($output, concat!(" ", $label, "={}"), value)?;
            }
        )*
        writeln!($output)
    }};
}
