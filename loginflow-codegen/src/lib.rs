use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use quote::quote_spanned;
use std::path::Path;

const FIXTURE_EXTENSIONS: [&str; 3] = ["har", "loli", "sb"];

/// Runs a flow session over a fixture file and passes the report to the test body.
///
/// ```ignore
/// #[loginflow_fixture_test("fixtures/login.har", configure)]
/// fn login_trace(report: loginflow::SessionReport) { ... }
/// ```
///
/// The path is relative to the manifest directory of the crate under test. The
/// configuration function receives a `&mut loginflow::SessionConfiguration` and is optional.
#[proc_macro_attribute]
pub fn loginflow_fixture_test(attrs: TokenStream, item: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(item as syn::ItemFn);
    let args = syn::parse_macro_input!(attrs as syn::AttributeArgs);

    let name = &input.sig.ident;
    let inputs = &input.sig.inputs;
    let block = &input.block;

    if args.is_empty() || args.len() > 2 {
        return quote! {
            compile_error!("A fixture path and an optional configuration function should be passed to the macro");
        }
        .into();
    }

    if inputs.len() != 1 {
        return quote_spanned! {input.sig.ident.span()=>
            compile_error!("The test function should take exactly one loginflow::SessionReport argument");
        }
        .into();
    }

    let fixture_path: String;

    if let syn::NestedMeta::Lit(syn::Lit::Str(parsed_fixture_path)) = &args[0] {
        fixture_path = parsed_fixture_path.value();
        if let Err(stream) = validate_fixture_path(&fixture_path, parsed_fixture_path.span()) {
            return stream.into();
        }
    } else {
        return quote! {
            compile_error!("The first argument should be a string literal!");
        }
        .into();
    }

    let configure = match args.get(1) {
        Some(syn::NestedMeta::Meta(syn::Meta::Path(function_path))) => {
            quote! { #function_path(&mut __loginflow_configuration); }
        }
        Some(_) => {
            return quote! {
                compile_error!("The second argument should be a configuration function!");
            }
            .into();
        }
        None => quote! {},
    };

    let output = quote! {
        #[test]
        fn #name() {
            fn __loginflow_fixture_body(#inputs) #block

            #[allow(unused_mut)]
            let mut __loginflow_configuration = loginflow::SessionConfiguration::new();
            #configure

            let __loginflow_input = match loginflow::InputFile::read(
                concat!(env!("CARGO_MANIFEST_DIR"), "/", #fixture_path)
            ) {
                Ok(input) => input,
                Err(e) => panic!("Loginflow Error: cannot read fixture {}: {}", #fixture_path, e),
            };

            match loginflow::FlowSession::run(&__loginflow_configuration, vec![__loginflow_input]) {
                Ok(report) => __loginflow_fixture_body(report),
                Err(e) => panic!("Loginflow Error: {}", e),
            }
        }
    };

    TokenStream::from(output)
}

fn validate_fixture_path<P: AsRef<Path>>(
    path: P,
    span: Span,
) -> Result<(), proc_macro2::TokenStream> {
    let supported = path
        .as_ref()
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .map_or(false, |e| FIXTURE_EXTENSIONS.contains(&e.as_str()));

    if !supported {
        return Err(quote_spanned! {span=>
            compile_error!("The path should point to a .har, .loli or .sb file!");
        });
    }

    Ok(())
}
